use crate::error::AppError;
use codex_cache::CacheTag;
use std::str::FromStr;

/// Groups of cached results that are invalidated together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RagCacheTag {
    /// Vector store lookups; stale after re-ingesting documentation
    Retrieval,
    /// Final answers from both query endpoints
    Answer,
    Embedding,
    Completion,
}

impl RagCacheTag {
    pub const ALL: [RagCacheTag; 4] = [
        RagCacheTag::Retrieval,
        RagCacheTag::Answer,
        RagCacheTag::Embedding,
        RagCacheTag::Completion,
    ];
}

impl CacheTag for RagCacheTag {
    fn name(&self) -> &str {
        match self {
            RagCacheTag::Retrieval => "retrieval",
            RagCacheTag::Answer => "answer",
            RagCacheTag::Embedding => "embedding",
            RagCacheTag::Completion => "completion",
        }
    }
}

impl FromStr for RagCacheTag {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RagCacheTag::ALL
            .into_iter()
            .find(|tag| tag.name() == s)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown cache tag: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for tag in RagCacheTag::ALL {
            assert_eq!(tag.name().parse::<RagCacheTag>().unwrap(), tag);
        }
        assert!("answers".parse::<RagCacheTag>().is_err());
    }
}
