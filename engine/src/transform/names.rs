//! Name generation for synthesized attributes, collections and contexts.

/// Return `candidate` if it is free, otherwise `candidate (i)` with the
/// smallest `i >= 1` not in `existing`.
pub fn unique_name<S: AsRef<str>>(candidate: &str, existing: &[S]) -> String {
    let taken = |name: &str| existing.iter().any(|e| e.as_ref() == name);
    if !taken(candidate) {
        return candidate.to_string();
    }
    (1..)
        .map(|i| format!("{} ({})", candidate, i))
        .find(|name| !taken(name))
        .unwrap_or_else(|| candidate.to_string())
}

/// Wrap a name in parentheses if it contains whitespace.
pub fn parenthesize_name(name: &str) -> String {
    if name.chars().any(char::is_whitespace) {
        format!("({})", name)
    } else {
        name.to_string()
    }
}

/// `a`, `a and b`, `a, b, and c`.
pub fn list_as_string<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [one] => one.as_ref().to_string(),
        [a, b] => format!("{} and {}", a.as_ref(), b.as_ref()),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            format!("{}, and {}", head.join(", "), last.as_ref())
        }
    }
}

/// `word` or `words` depending on how many items there are.
pub fn plural_suffix<T>(word: &str, items: &[T]) -> String {
    if items.len() == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unique_name() {
        let existing = vec!["Age", "Age (1)"];
        assert_eq!(unique_name("Height", &existing), "Height");
        assert_eq!(unique_name("Age", &existing), "Age (2)");
        assert_eq!(unique_name("Age (1)", &existing), "Age (1) (1)");
    }

    #[test]
    fn test_list_as_string() {
        assert_eq!(list_as_string::<&str>(&[]), "");
        assert_eq!(list_as_string(&["a"]), "a");
        assert_eq!(list_as_string(&["a", "b"]), "a and b");
        assert_eq!(list_as_string(&["a", "b", "c"]), "a, b, and c");
    }

    #[test]
    fn test_parenthesize_and_plural() {
        assert_eq!(parenthesize_name("Age"), "Age");
        assert_eq!(parenthesize_name("Birth Year"), "(Birth Year)");
        assert_eq!(plural_suffix("attribute", &[1]), "attribute");
        assert_eq!(plural_suffix("attribute", &[1, 2]), "attributes");
    }

    proptest! {
        #[test]
        fn prop_unique_name_never_collides(
            candidate in "[a-c]{1,2}",
            existing in proptest::collection::vec("[a-c]{1,2}( \\([1-3]\\))?", 0..8),
            rounds in 1usize..6,
        ) {
            let mut names = existing.clone();
            let mut produced = Vec::new();
            for _ in 0..rounds {
                let name = unique_name(&candidate, &names);
                prop_assert!(!names.contains(&name));
                names.push(name.clone());
                produced.push(name);
            }
            if !existing.contains(&candidate) {
                prop_assert_eq!(&produced[0], &candidate);
            }
        }
    }
}
