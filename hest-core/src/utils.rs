//! Utility functions shared across the crate

/// Naming utilities
pub mod naming {
    /// Strips module paths from a type name.
    ///
    /// Generic arguments are shortened too, so
    /// `alloc::vec::Vec<my_app::users::User>` becomes `Vec<User>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hest_core::utils::naming::short_type_name;
    ///
    /// assert_eq!(short_type_name("my_app::users::UserService"), "UserService");
    /// assert_eq!(short_type_name("UserService"), "UserService");
    /// ```
    pub fn short_type_name(type_name: &str) -> String {
        let mut result = String::with_capacity(type_name.len());
        let mut segment = String::new();

        for ch in type_name.chars() {
            if matches!(ch, '<' | '>' | ',' | '(' | ')' | '[' | ']' | '&' | ';' | ' ') {
                result.push_str(last_segment(&segment));
                segment.clear();
                result.push(ch);
            } else {
                segment.push(ch);
            }
        }
        result.push_str(last_segment(&segment));
        result
    }

    fn last_segment(path: &str) -> &str {
        path.rsplit("::").next().unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::naming::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("demo::users::UserController"), "UserController");
        assert_eq!(
            short_type_name("alloc::vec::Vec<demo::users::User>"),
            "Vec<User>"
        );
        assert_eq!(
            short_type_name("std::collections::HashMap<alloc::string::String, u32>"),
            "HashMap<String, u32>"
        );
        assert_eq!(short_type_name("&str"), "&str");
        assert_eq!(short_type_name(""), "");
    }
}
