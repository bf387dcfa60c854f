/// Canonical key for matching a column name against a member name.
///
/// Underscores are dropped and letters lowercased, so `user_id`, `UserId`
/// and `USER_ID` all meet at `userid`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize_name;

    #[test]
    fn ignores_case_and_underscores() {
        assert_eq!(normalize_name("user_id"), "userid");
        assert_eq!(normalize_name("UserId"), "userid");
        assert_eq!(normalize_name("__USER__ID"), "userid");
    }

    #[test]
    fn keeps_other_characters() {
        assert_eq!(normalize_name("first name"), "first name");
        assert_eq!(normalize_name("a-b.c"), "a-b.c");
        assert_eq!(normalize_name(""), "");
    }
}
