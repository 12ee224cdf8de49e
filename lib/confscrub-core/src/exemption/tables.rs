use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Root fields holding document metadata.
pub(super) static ROOT_EXEMPTIONS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "_format_version",
        "_transform",
        "_workspace",
        "_konnect",
    ])
});

/// Fields of each entity type holding controlled vocabulary or structural values.
pub(super) static STATIC_EXEMPTIONS: LazyLock<HashMap<&'static str, HashSet<&'static str>>> =
    LazyLock::new(|| {
        HashMap::from([
            ("plugins", HashSet::from(["name", "protocols"])),
            ("consumer_group_plugins", HashSet::from(["name"])),
            ("partial_links", HashSet::from(["path"])),
            ("routes", HashSet::from(["methods", "protocols", "path_handling"])),
            ("services", HashSet::from(["protocol"])),
            (
                "upstreams",
                HashSet::from(["algorithm", "hash_on", "hash_fallback"]),
            ),
            ("vaults", HashSet::from(["name", "prefix"])),
            ("partials", HashSet::from(["type"])),
            ("jwt_secrets", HashSet::from(["algorithm"])),
        ])
    });

/// Key exempt wherever it occurs inside a configuration bag.
pub(super) const CONFIG_ID_KEY: &str = "id";
