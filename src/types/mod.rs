//! Catch-type lattice used by exception handler deduplication.
//!
//! Shadow removal compares the declared catch types of handlers within one try
//! region: a handler whose type is wider-than-or-equal to an earlier handler's
//! type can never fire and is dropped. The comparison needs the class
//! hierarchy, which is built once before per-method processing begins and is
//! only ever read afterwards, so it can be shared across the worker pool
//! without synchronization beyond the map itself.
//!
//! Resolution failures never fail a method: a class name that is not present
//! in the hierarchy is treated as an opaque type that only compares equal to
//! itself and narrower than the catch-all sentinel.

use dashmap::DashMap;

/// A reference to an exception type as it appears in catch metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// The "any throwable" sentinel, produced by catch-all handlers.
    ///
    /// Wider-than-or-equal to every other type.
    AllThrowable,
    /// A named class.
    Class(String),
}

impl TypeRef {
    /// Creates a class reference from a name.
    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class(name.into())
    }

    /// Returns the class name, or the sentinel's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            TypeRef::AllThrowable => "java.lang.Throwable",
            TypeRef::Class(name) => name,
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved superclass relationships, shared read-only across method workers.
///
/// The hierarchy maps each class name to its direct superclass. Lookups walk
/// the chain upwards; a missing entry terminates the walk.
///
/// # Examples
///
/// ```rust
/// use regscope::types::{TypeHierarchy, TypeRef};
///
/// let types = TypeHierarchy::new();
/// types.add_class("java.lang.Exception", Some("java.lang.Throwable"));
/// types.add_class("java.lang.RuntimeException", Some("java.lang.Exception"));
/// types.add_class("java.lang.NullPointerException", Some("java.lang.RuntimeException"));
///
/// let npe = TypeRef::class("java.lang.NullPointerException");
/// let ex = TypeRef::class("java.lang.Exception");
/// assert!(types.is_wider_or_equal(&ex, &npe));
/// assert!(!types.is_wider_or_equal(&npe, &ex));
/// ```
#[derive(Debug, Default)]
pub struct TypeHierarchy {
    /// Direct superclass per class name.
    supers: DashMap<String, String>,
}

impl TypeHierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            supers: DashMap::new(),
        }
    }

    /// Registers a class and its direct superclass.
    ///
    /// # Arguments
    ///
    /// * `name` - The class name
    /// * `super_name` - The direct superclass, or `None` for hierarchy roots
    pub fn add_class(&self, name: impl Into<String>, super_name: Option<&str>) {
        let name = name.into();
        if let Some(sup) = super_name {
            self.supers.insert(name, sup.to_string());
        } else {
            self.supers.remove(&name);
        }
    }

    /// Returns `true` if `a` is a supertype of `b` or the same type.
    ///
    /// The catch-all sentinel is wider-than-or-equal to everything. A class
    /// name that cannot be resolved compares equal only to itself.
    #[must_use]
    pub fn is_wider_or_equal(&self, a: &TypeRef, b: &TypeRef) -> bool {
        match (a, b) {
            (TypeRef::AllThrowable, _) => true,
            (TypeRef::Class(_), TypeRef::AllThrowable) => false,
            (TypeRef::Class(wide), TypeRef::Class(narrow)) => {
                if wide == narrow {
                    return true;
                }
                let mut current = narrow.clone();
                // Walk up the superclass chain; an unresolvable link stops the
                // walk and the types are treated as unrelated.
                while let Some(sup) = self.supers.get(&current) {
                    if sup.value() == wide {
                        return true;
                    }
                    current = sup.value().clone();
                }
                false
            }
        }
    }

    /// Computes the least-upper-bound of two catch types.
    ///
    /// Used to reduce a multi-catch handler's type list to a single maximal
    /// type before shadow comparison. When the types share no resolvable
    /// common ancestor, the catch-all sentinel is returned as the
    /// conservative answer.
    #[must_use]
    pub fn least_upper_bound(&self, a: &TypeRef, b: &TypeRef) -> TypeRef {
        if a == b {
            return a.clone();
        }
        match (a, b) {
            (TypeRef::AllThrowable, _) | (_, TypeRef::AllThrowable) => TypeRef::AllThrowable,
            (TypeRef::Class(left), TypeRef::Class(right)) => {
                let left_chain = self.chain_of(left);
                let mut current = right.clone();
                loop {
                    if left_chain.iter().any(|c| c == &current) {
                        return TypeRef::Class(current);
                    }
                    match self.supers.get(&current) {
                        Some(sup) => current = sup.value().clone(),
                        None => return TypeRef::AllThrowable,
                    }
                }
            }
        }
    }

    /// Collects `name` and all of its resolvable ancestors.
    fn chain_of(&self, name: &str) -> Vec<String> {
        let mut chain = vec![name.to_string()];
        let mut current = name.to_string();
        while let Some(sup) = self.supers.get(&current) {
            chain.push(sup.value().clone());
            current = sup.value().clone();
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throwables() -> TypeHierarchy {
        let types = TypeHierarchy::new();
        types.add_class("java.lang.Exception", Some("java.lang.Throwable"));
        types.add_class("java.lang.RuntimeException", Some("java.lang.Exception"));
        types.add_class(
            "java.lang.NullPointerException",
            Some("java.lang.RuntimeException"),
        );
        types.add_class("java.io.IOException", Some("java.lang.Exception"));
        types.add_class("java.io.FileNotFoundException", Some("java.io.IOException"));
        types
    }

    #[test]
    fn test_sentinel_is_widest() {
        let types = throwables();
        let npe = TypeRef::class("java.lang.NullPointerException");

        assert!(types.is_wider_or_equal(&TypeRef::AllThrowable, &npe));
        assert!(types.is_wider_or_equal(&TypeRef::AllThrowable, &TypeRef::AllThrowable));
        assert!(!types.is_wider_or_equal(&npe, &TypeRef::AllThrowable));
    }

    #[test]
    fn test_supertype_chain_walk() {
        let types = throwables();
        let ex = TypeRef::class("java.lang.Exception");
        let fnf = TypeRef::class("java.io.FileNotFoundException");

        assert!(types.is_wider_or_equal(&ex, &fnf));
        assert!(types.is_wider_or_equal(&fnf, &fnf));
        assert!(!types.is_wider_or_equal(&fnf, &ex));
    }

    #[test]
    fn test_unresolved_class_is_opaque() {
        let types = throwables();
        let unknown = TypeRef::class("com.example.Mystery");
        let ex = TypeRef::class("java.lang.Exception");

        assert!(types.is_wider_or_equal(&unknown, &unknown));
        assert!(!types.is_wider_or_equal(&ex, &unknown));
        assert!(!types.is_wider_or_equal(&unknown, &ex));
        // The sentinel still covers opaque types.
        assert!(types.is_wider_or_equal(&TypeRef::AllThrowable, &unknown));
    }

    #[test]
    fn test_least_upper_bound_siblings() {
        let types = throwables();
        let npe = TypeRef::class("java.lang.NullPointerException");
        let io = TypeRef::class("java.io.IOException");

        assert_eq!(
            types.least_upper_bound(&npe, &io),
            TypeRef::class("java.lang.Exception")
        );
    }

    #[test]
    fn test_least_upper_bound_unrelated_falls_back_to_sentinel() {
        let types = throwables();
        let npe = TypeRef::class("java.lang.NullPointerException");
        let unknown = TypeRef::class("com.example.Mystery");

        assert_eq!(
            types.least_upper_bound(&npe, &unknown),
            TypeRef::AllThrowable
        );
    }
}
