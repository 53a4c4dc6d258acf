//! Flat, dot-separated metric names for hierarchical backends.

use crate::registry::{MeterId, Statistic};

/// Maps a meter id and statistic to `name.k1.v1.k2.v2.statistic`.
///
/// Tags are emitted in key order. Characters other than ASCII letters,
/// digits, `_` and `-` are replaced with `_` in tag keys and values, so a
/// value such as `/api/{id}` cannot add levels to the hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicalNameMapper;

impl HierarchicalNameMapper {
    pub fn name(&self, id: &MeterId, statistic: Statistic) -> String {
        let mut out = id
            .name()
            .split('.')
            .map(sanitize)
            .collect::<Vec<_>>()
            .join(".");
        for tag in id.tags() {
            out.push('.');
            out.push_str(&sanitize(tag.key()));
            out.push('.');
            out.push_str(&sanitize(tag.value()));
        }
        out.push('.');
        out.push_str(&statistic.suffix());
        out
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Tags;

    #[test]
    fn test_tags_in_key_order() {
        let id = MeterId::new(
            "http_server_requests",
            Tags::from([("uri", "/api/{id}"), ("method", "GET")]),
        );
        assert_eq!(
            HierarchicalNameMapper.name(&id, Statistic::Count),
            "http_server_requests.method.GET.uri._api__id_.count"
        );
    }

    #[test]
    fn test_dotted_names_keep_hierarchy() {
        let id = MeterId::new("jvm.memory used", Tags::empty());
        assert_eq!(
            HierarchicalNameMapper.name(&id, Statistic::Value),
            "jvm.memory_used.value"
        );
    }
}
