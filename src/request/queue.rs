use std::fmt;

/// An ordered list of SGE queue names, rendered as `q1,q2` for the `-q` flag
///
/// Queue names never contain whitespace, so every whitespace character in the raw input is
/// dropped. Empty tokens (`a,,b`, trailing or leading commas) are dropped as well. The result is
/// canonical: parsing the rendered form of a `QueueList` gives back the same list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueList {
    queues: Vec<String>,
}

impl QueueList {
    pub fn parse(raw: &str) -> QueueList {
        let queues = raw
            .split(',')
            .map(|token| token.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|token| !token.is_empty())
            .collect();
        QueueList { queues }
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queues.iter().map(String::as_str)
    }
}

impl fmt::Display for QueueList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.queues.join(","))
    }
}

/// Clean up free-form queue input into `q1,q2`, or an empty string if no queue names remain
pub fn normalize(raw: &str) -> String {
    QueueList::parse(raw).to_string()
}

#[cfg(test)]
mod test {
    use super::{normalize, QueueList};

    #[test]
    fn test_normalize_spaces_and_trailing_commas() {
        assert_eq!(normalize("  scv.q , sci.q,,  "), "scv.q,sci.q");
    }

    #[test]
    fn test_normalize_tabs_and_spaces_around_commas() {
        assert_eq!(normalize("\tq1 ,q2, q3\t,\t"), "q1,q2,q3");
        assert_eq!(normalize("q1 , q2"), "q1,q2");
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(" , ,,\t"), "");
        assert!(QueueList::parse(",,").is_empty());
    }

    #[test]
    fn test_normalize_inner_empty_tokens() {
        assert_eq!(normalize(",q1,,q2"), "q1,q2");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "  scv.q , sci.q,,  ",
            "a b,c",
            ",,,",
            "all.q",
            " x ,\t y ,, z,\t,",
            "q1,q2",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_queue_order_is_kept() {
        let queues = QueueList::parse("sci.q, scv.q ,all.q");
        assert_eq!(queues.iter().collect::<Vec<_>>(), vec!["sci.q", "scv.q", "all.q"]);
    }
}
