use bson::Bson;

/// True when some joined action document carries `key == viewer`.
///
/// `actions` is the array produced by a join against `like` or `share`
/// for one post; it only ever holds the rows of the current page.
pub fn viewer_engaged(actions: &[Bson], key: &str, viewer: &str) -> bool {
    actions.iter().any(|action| match action {
        Bson::Document(doc) => matches!(doc.get(key), Some(Bson::String(id)) if id == viewer),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn flags_only_the_matching_viewer() {
        let likes = vec![
            Bson::Document(doc! { "userId": "alice" }),
            Bson::Document(doc! { "userId": "bob" }),
        ];

        assert!(viewer_engaged(&likes, "userId", "alice"));
        assert!(viewer_engaged(&likes, "userId", "bob"));
        assert!(!viewer_engaged(&likes, "userId", "carol"));
    }

    #[test]
    fn empty_or_malformed_actions_never_match() {
        assert!(!viewer_engaged(&[], "userId", "alice"));

        let malformed = vec![
            Bson::String("alice".to_string()),
            Bson::Document(doc! { "user": "alice" }),
            Bson::Document(doc! { "userId": 42 }),
        ];
        assert!(!viewer_engaged(&malformed, "userId", "alice"));
    }
}
