use crate::k8s::labels::Map;

/// Parses an equality label selector such as `app=web, tier=frontend`.
///
/// Parsing never fails: segments that are not exactly one `key=value` pair,
/// or that have an empty key, are dropped. Whitespace around keys and values
/// is ignored. Later duplicates of a key win.
pub fn parse(selector: &str) -> Map {
    selector
        .split(',')
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            if value.contains('=') {
                return None;
            }
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn parses_selectors() {
        for (input, expected) in [
            ("", Map::new()),
            ("   ", Map::new()),
            (
                "app=nginx",
                btreemap! { "app".to_string() => "nginx".to_string() },
            ),
            (
                "app=nginx,env=prod",
                btreemap! {
                    "app".to_string() => "nginx".to_string(),
                    "env".to_string() => "prod".to_string(),
                },
            ),
            (
                " app = nginx ,  env= prod ",
                btreemap! {
                    "app".to_string() => "nginx".to_string(),
                    "env".to_string() => "prod".to_string(),
                },
            ),
            (
                "app=nginx,invalid,env=prod",
                btreemap! {
                    "app".to_string() => "nginx".to_string(),
                    "env".to_string() => "prod".to_string(),
                },
            ),
            ("a=b=c", Map::new()),
            ("=orphan", Map::new()),
            (",,,", Map::new()),
            ("tier=", btreemap! { "tier".to_string() => String::new() }),
        ] {
            assert_eq!(parse(input), expected, "parsing {input:?}");
        }
    }

    #[test]
    fn later_duplicates_win() {
        assert_eq!(
            parse("app=a,app=b"),
            btreemap! { "app".to_string() => "b".to_string() }
        );
    }
}
