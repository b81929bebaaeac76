//! Coupling surface to the host markup.
//!
//! Every selector and marker name the core relies on lives here. Ordered lists
//! are precedence lists: earlier entries win.

use std::sync::Arc;

use once_cell::sync::Lazy;

use feedguard_document::{DocumentTree, NodeId, SelectorError, SelectorList};

/// Item containers matched by the combined scan query.
pub const SCAN_CONTAINERS: &[&str] = &[
    "ytd-rich-item-renderer",
    "ytd-video-renderer",
    "ytd-grid-video-renderer",
    "ytd-compact-video-renderer",
    "ytd-playlist-video-renderer",
    "ytd-playlist-panel-video-renderer",
    "ytd-reel-item-renderer",
    "ytd-rich-grid-media",
    "ytm-shorts-lockup-view-model",
    "yt-lockup-view-model",
    "ytd-movie-renderer",
    "ytd-watch-card-compact-video-renderer",
];

pub const IDENTITY_ATTRIBUTE: &str = "data-video-id";

/// Links whose address carries an identifier.
pub const CONTENT_LINK: &str = "a[href*=\"/watch?v=\"], a[href*=\"/shorts/\"]";

/// Region observed for changes and reset at the start of each pass.
pub const CONTENT_REGION: &str = "ytd-page-manager";

/// Ancestor-or-self containers that receive the hidden marker.
pub const HIDE_CONTAINERS: &[&str] = &[
    "ytd-rich-item-renderer",
    "ytd-video-renderer",
    "ytd-grid-video-renderer",
    "ytd-compact-video-renderer",
    "ytd-playlist-video-renderer",
    "ytd-playlist-panel-video-renderer",
    "ytd-reel-item-renderer",
    "ytm-shorts-lockup-view-model",
    "yt-lockup-view-model",
    "ytd-movie-renderer",
    "ytd-watch-card-compact-video-renderer",
];

/// Innermost media container that hosts the badge overlay; the content link
/// selector is appended as the last resort.
pub const MEDIA_CONTAINERS: &[&str] = &[
    "ytd-thumbnail a#thumbnail",
    "a#thumbnail",
    "yt-thumbnail-view-model",
    ".shortsLockupViewModelHostThumbnailContainer",
    "ytd-playlist-thumbnail",
    "ytd-thumbnail",
];

/// Ancestor-or-self of the media container that receives the blur marker.
pub const BLUR_CONTAINERS: &[&str] = &[
    "ytd-thumbnail",
    "yt-thumbnail-view-model",
    "ytd-playlist-thumbnail",
    ".shortsLockupViewModelHostThumbnailContainer",
];

pub const HIDDEN_CLASS: &str = "feedguard-hidden";
pub const BLURRED_CLASS: &str = "feedguard-blurred";
pub const BADGE_CLASS: &str = "feedguard-badge";
pub const BADGE_TAG: &str = "div";
pub const BADGE_ID_ATTRIBUTE: &str = "data-feedguard-id";
pub const BADGE_COUNT_ATTRIBUTE: &str = "data-feedguard-count";

static STANDARD: Lazy<Arc<MarkupTable>> = Lazy::new(|| {
    Arc::new(MarkupTable::from_sources(MarkupSources::default()).expect("built-in markup table"))
});

/// Raw selector sources a [`MarkupTable`] is compiled from.
#[derive(Clone, Debug)]
pub struct MarkupSources {
    pub scan_containers: Vec<String>,
    pub identity_attribute: String,
    pub content_link: String,
    pub content_region: String,
    pub hide_containers: Vec<String>,
    pub media_containers: Vec<String>,
    pub blur_containers: Vec<String>,
}

impl Default for MarkupSources {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            scan_containers: owned(SCAN_CONTAINERS),
            identity_attribute: IDENTITY_ATTRIBUTE.to_string(),
            content_link: CONTENT_LINK.to_string(),
            content_region: CONTENT_REGION.to_string(),
            hide_containers: owned(HIDE_CONTAINERS),
            media_containers: owned(MEDIA_CONTAINERS),
            blur_containers: owned(BLUR_CONTAINERS),
        }
    }
}

/// Compiled markup table.
#[derive(Clone, Debug)]
pub struct MarkupTable {
    pub scan_containers: SelectorList,
    pub identity_attribute: String,
    pub identity_carrier: SelectorList,
    pub content_link: SelectorList,
    pub content_region: SelectorList,
    pub hide_containers: Vec<SelectorList>,
    pub media_containers: Vec<SelectorList>,
    pub blur_containers: Vec<SelectorList>,
    pub badge: SelectorList,
    pub hidden: SelectorList,
    pub blurred: SelectorList,
}

impl MarkupTable {
    pub fn standard() -> Arc<MarkupTable> {
        Arc::clone(&STANDARD)
    }

    pub fn from_sources(sources: MarkupSources) -> Result<Self, SelectorError> {
        let each = |list: &[String]| {
            list.iter()
                .map(|source| SelectorList::parse(source))
                .collect::<Result<Vec<_>, _>>()
        };
        let mut media_containers = each(&sources.media_containers)?;
        media_containers.push(SelectorList::parse(&sources.content_link)?);

        Ok(Self {
            scan_containers: SelectorList::parse_all(
                sources.scan_containers.iter().map(String::as_str),
            )?,
            identity_carrier: SelectorList::parse(&format!("[{}]", sources.identity_attribute))?,
            identity_attribute: sources.identity_attribute,
            content_link: SelectorList::parse(&sources.content_link)?,
            content_region: SelectorList::parse(&sources.content_region)?,
            hide_containers: each(&sources.hide_containers)?,
            media_containers,
            blur_containers: each(&sources.blur_containers)?,
            badge: SelectorList::parse(&format!(".{BADGE_CLASS}"))?,
            hidden: SelectorList::parse(&format!(".{HIDDEN_CLASS}"))?,
            blurred: SelectorList::parse(&format!(".{BLURRED_CLASS}"))?,
        })
    }

    /// The observed content region, or the document root when the host has
    /// not rendered it.
    pub fn content_root<D>(&self, doc: &D) -> NodeId
    where
        D: DocumentTree + ?Sized,
    {
        let root = doc.root();
        doc.find_within(root, &self.content_region).unwrap_or(root)
    }

    /// Whether `node` is, or contains, an item container.
    pub fn holds_container<D>(&self, doc: &D, node: NodeId) -> bool
    where
        D: DocumentTree + ?Sized,
    {
        doc.find_within(node, &self.scan_containers).is_some()
    }
}
