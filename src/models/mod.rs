mod counter;
mod post;
mod todo;
mod user_profile;

pub use counter::Counter;
pub use post::Post;
pub use todo::Todo;
pub use user_profile::UserProfile;

use std::fmt;

/// The collections the application reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Todos,
    Posts,
    Counters,
    /// Credential records, only touched by the identity provider
    Accounts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Todos => "todos",
            Collection::Posts => "posts",
            Collection::Counters => "counters",
            Collection::Accounts => "accounts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Users.as_str(), "users");
        assert_eq!(Collection::Todos.as_str(), "todos");
        assert_eq!(Collection::Posts.as_str(), "posts");
        assert_eq!(Collection::Counters.as_str(), "counters");
        assert_eq!(format!("{}", Collection::Accounts), "accounts");
    }
}
