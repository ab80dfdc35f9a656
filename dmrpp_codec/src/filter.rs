use serde::{Deserialize, Serialize};

/// A filter applied to the chunks of a variable.
///
/// Filters are identified by the names used in the `compressionType` attribute of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "FilterMetadata", into = "FilterMetadata")]
pub enum Filter {
    /// Zlib (deflate) compression.
    Deflate,
    /// The HDF5 byte shuffle.
    Shuffle {
        /// The size of an element in bytes.
        element_size: usize,
    },
    /// The HDF5 fletcher32 checksum, stored after the chunk data.
    Fletcher32,
    /// A filter that is not implemented.
    ///
    /// Decoding a pipeline with an unsupported filter fails rather than skipping the filter.
    Unsupported(String),
}

impl Filter {
    /// Create a filter from its name.
    ///
    /// `element_size` parameterises the shuffle filter and is otherwise ignored.
    /// Unrecognised names produce [`Filter::Unsupported`].
    #[must_use]
    pub fn from_name(name: &str, element_size: usize) -> Self {
        match name {
            "deflate" => Self::Deflate,
            "shuffle" => Self::Shuffle { element_size },
            "fletcher32" => Self::Fletcher32,
            name => Self::Unsupported(name.to_string()),
        }
    }

    /// Return the name of the filter.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Deflate => "deflate",
            Self::Shuffle { .. } => "shuffle",
            Self::Fletcher32 => "fletcher32",
            Self::Unsupported(name) => name,
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shuffle { element_size } => write!(f, "shuffle({element_size})"),
            filter => f.write_str(filter.name()),
        }
    }
}

/// How the filter list of a [`CompressionPipelineSpec`](crate::CompressionPipelineSpec) is interpreted.
///
/// Manifests produced by different tool versions list the same filter chain with different meanings.
/// The order is always an explicit input, it is never inferred from the filter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOrder {
    /// Inflate (if `deflate` is listed) and then unshuffle (if `shuffle` is listed), regardless of the listing order.
    ///
    /// Any other filter is unsupported in this order.
    Legacy,
    /// Filters are listed in the order they were applied when encoding, and are decoded in reverse.
    Declared,
}

#[derive(Serialize, Deserialize)]
struct FilterMetadata {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    element_size: Option<usize>,
}

impl From<FilterMetadata> for Filter {
    fn from(metadata: FilterMetadata) -> Self {
        Self::from_name(&metadata.name, metadata.element_size.unwrap_or_default())
    }
}

impl From<Filter> for FilterMetadata {
    fn from(filter: Filter) -> Self {
        let element_size = match filter {
            Filter::Shuffle { element_size } => Some(element_size),
            _ => None,
        };
        Self {
            name: filter.name().to_string(),
            element_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_from_name() {
        assert_eq!(Filter::from_name("deflate", 4), Filter::Deflate);
        assert_eq!(
            Filter::from_name("shuffle", 4),
            Filter::Shuffle { element_size: 4 }
        );
        assert_eq!(Filter::from_name("fletcher32", 4), Filter::Fletcher32);
        assert_eq!(
            Filter::from_name("szip", 4),
            Filter::Unsupported("szip".to_string())
        );
        assert_eq!(Filter::Shuffle { element_size: 8 }.to_string(), "shuffle(8)");
        assert_eq!(Filter::Unsupported("szip".to_string()).to_string(), "szip");
    }

    #[test]
    fn filter_serde() {
        let filters: Vec<Filter> = serde_json::from_str(
            r#"[{"name":"shuffle","element_size":2},{"name":"deflate"},{"name":"lzf"}]"#,
        )
        .unwrap();
        assert_eq!(
            filters,
            [
                Filter::Shuffle { element_size: 2 },
                Filter::Deflate,
                Filter::Unsupported("lzf".to_string())
            ]
        );
        assert_eq!(
            serde_json::to_string(&filters[0]).unwrap(),
            r#"{"name":"shuffle","element_size":2}"#
        );
        assert_eq!(
            serde_json::from_str::<FilterOrder>(r#""legacy""#).unwrap(),
            FilterOrder::Legacy
        );
    }
}
