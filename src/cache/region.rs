use std::fmt;

/// Named partitions of the published-content caches.
///
/// Every key written into a region starts with the region prefix, so a region can be
/// invalidated as a whole with a single prefix clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRegion {
    Domain,
    Elements,
    PublishedContent,
    PublishedMedia,
    PublishedMember,
    Snapshot,
}

impl CacheRegion {
    pub const ALL: [CacheRegion; 6] = [
        CacheRegion::Domain,
        CacheRegion::Elements,
        CacheRegion::PublishedContent,
        CacheRegion::PublishedMedia,
        CacheRegion::PublishedMember,
        CacheRegion::Snapshot,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            CacheRegion::Domain => "v0:DomainCache",
            CacheRegion::Elements => "v0:ElementsCache",
            CacheRegion::PublishedContent => "v0:PublishedContentCache",
            CacheRegion::PublishedMedia => "v0:PublishedMediaCache",
            CacheRegion::PublishedMember => "v0:PublishedMemberCache",
            CacheRegion::Snapshot => "v0:SnapshotCache",
        }
    }
}

impl fmt::Display for CacheRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
