use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Key under which a service is registered.
///
/// Named tokens compare by string; type tokens compare by [`TypeId`] only, the
/// stored type name is kept for diagnostics.
#[derive(Clone)]
pub enum Token {
    /// A string identifier such as `"db"` or `"config"`.
    Named(Cow<'static, str>),
    /// A concrete Rust type.
    Type { id: TypeId, name: &'static str },
}

impl Token {
    /// Creates a named token.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Named(name.into())
    }

    /// Creates a token keyed on the type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Human-readable name of the token.
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Type { name, .. } => name,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Named(a), Self::Named(b)) => a == b,
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Named(name) => {
                0u8.hash(state);
                name.hash(state);
            }
            Self::Type { id, .. } => {
                1u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "Named({name:?})"),
            Self::Type { name, .. } => write!(f, "Type({name})"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Self::Named(Cow::Borrowed(name))
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Self::Named(Cow::Owned(name))
    }
}

impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Marker;

    #[test]
    fn test_named_tokens_compare_by_name() {
        assert_eq!(Token::from("db"), Token::named(String::from("db")));
        assert_ne!(Token::from("db"), Token::from("cache"));
    }

    #[test]
    fn test_type_and_named_tokens_never_collide() {
        let named = Token::named(std::any::type_name::<Marker>());
        let typed = Token::of::<Marker>();
        assert_ne!(named, typed);

        let set: HashSet<Token> = [named, typed].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_uses_type_name() {
        assert!(Token::of::<Marker>().to_string().ends_with("Marker"));
    }
}
