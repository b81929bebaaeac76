use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use feedguard_core_types::{Identifier, NodeId};
use feedguard_document::{DocumentTree, SelectorList};
use item_scanner::markup::{
    MarkupTable, BADGE_CLASS, BADGE_COUNT_ATTRIBUTE, BADGE_ID_ATTRIBUTE, BADGE_TAG, BLURRED_CLASS,
    HIDDEN_CLASS,
};

use crate::errors::ApplyError;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualState {
    Unmarked,
    Hidden,
    Annotated,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnnotateOutcome {
    Attached {
        badge: NodeId,
        media: NodeId,
        blurred: NodeId,
    },
    AlreadyAnnotated(NodeId),
    /// The item is hidden; hidden items never carry an overlay.
    SkippedHidden,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ResetSummary {
    pub badges: usize,
    pub hidden: usize,
    pub blurred: usize,
}

impl ResetSummary {
    pub fn total(&self) -> usize {
        self.badges + self.hidden + self.blurred
    }
}

pub struct VisualStateApplier {
    doc: Arc<dyn DocumentTree>,
    markup: Arc<MarkupTable>,
}

impl VisualStateApplier {
    pub fn new(doc: Arc<dyn DocumentTree>, markup: Arc<MarkupTable>) -> Self {
        Self { doc, markup }
    }

    /// Marks the item holding `candidate` as hidden and drops any overlay or
    /// blur inside it. Returns the container that received the marker.
    pub fn hide(&self, candidate: NodeId) -> Result<NodeId, ApplyError> {
        let doc = self.doc.as_ref();
        if !doc.is_attached(candidate) {
            return Err(ApplyError::ContainerNotFound(candidate));
        }
        let container = first_closest(doc, candidate, &self.markup.hide_containers)
            .unwrap_or(candidate);

        let cleared = self.clear_overlays(container);
        if doc.add_class(container, HIDDEN_CLASS) {
            debug!(target: "feedguard.visual", %container, cleared, "item hidden");
        }
        Ok(container)
    }

    /// Attaches one overlay carrying `id` and `count` to the item's media
    /// container and blurs the surrounding thumbnail. Repeated calls leave a
    /// single overlay.
    pub fn annotate(
        &self,
        candidate: NodeId,
        id: &Identifier,
        count: u64,
    ) -> Result<AnnotateOutcome, ApplyError> {
        let doc = self.doc.as_ref();
        if !doc.is_attached(candidate) {
            return Err(ApplyError::ContainerNotFound(candidate));
        }
        if let Some(existing) = doc.find_within(candidate, &self.markup.badge) {
            trace!(target: "feedguard.visual", %candidate, "overlay already present");
            return Ok(AnnotateOutcome::AlreadyAnnotated(existing));
        }
        if self.is_hidden(candidate) {
            return Ok(AnnotateOutcome::SkippedHidden);
        }

        let media = first_within(doc, candidate, &self.markup.media_containers)
            .ok_or(ApplyError::ContainerNotFound(candidate))?;
        match doc.style(media, "position").as_deref() {
            None | Some("") | Some("static") => {
                doc.set_style(media, "position", "relative");
            }
            Some(_) => {}
        }

        let badge = doc.create_element(BADGE_TAG);
        doc.add_class(badge, BADGE_CLASS);
        doc.set_attribute(badge, BADGE_ID_ATTRIBUTE, id.as_str());
        doc.set_attribute(badge, BADGE_COUNT_ATTRIBUTE, &count.to_string());
        doc.set_attribute(badge, "title", &hover_text(count));
        if !doc.append_child(media, badge) {
            return Err(ApplyError::Rejected(media));
        }

        let blurred = first_closest(doc, media, &self.markup.blur_containers).unwrap_or(media);
        doc.add_class(blurred, BLURRED_CLASS);

        debug!(target: "feedguard.visual", %candidate, identifier = %id, count, "item annotated");
        Ok(AnnotateOutcome::Attached {
            badge,
            media,
            blurred,
        })
    }

    /// Strips every marker under `root` (inclusive).
    pub fn reset(&self, root: NodeId) -> ResetSummary {
        let doc = self.doc.as_ref();
        let mut summary = ResetSummary::default();

        for badge in self_and_descendants(doc, root, &self.markup.badge) {
            if doc.remove(badge) {
                summary.badges += 1;
            }
        }
        for node in self_and_descendants(doc, root, &self.markup.hidden) {
            if doc.remove_class(node, HIDDEN_CLASS) {
                summary.hidden += 1;
            }
        }
        for node in self_and_descendants(doc, root, &self.markup.blurred) {
            if doc.remove_class(node, BLURRED_CLASS) {
                summary.blurred += 1;
            }
        }

        if summary.total() > 0 {
            debug!(
                target: "feedguard.visual",
                badges = summary.badges,
                hidden = summary.hidden,
                blurred = summary.blurred,
                "markers reset"
            );
        }
        summary
    }

    pub fn state_of(&self, candidate: NodeId) -> VisualState {
        if self.is_hidden(candidate) {
            VisualState::Hidden
        } else if self.doc.find_within(candidate, &self.markup.badge).is_some() {
            VisualState::Annotated
        } else {
            VisualState::Unmarked
        }
    }

    fn is_hidden(&self, candidate: NodeId) -> bool {
        self.doc.closest(candidate, &self.markup.hidden).is_some()
    }

    fn clear_overlays(&self, container: NodeId) -> usize {
        let doc = self.doc.as_ref();
        let mut cleared = 0;
        for badge in doc.query_all(container, &self.markup.badge) {
            if doc.remove(badge) {
                cleared += 1;
            }
        }
        for node in self_and_descendants(doc, container, &self.markup.blurred) {
            if doc.remove_class(node, BLURRED_CLASS) {
                cleared += 1;
            }
        }
        cleared
    }
}

fn hover_text(count: u64) -> String {
    match count {
        1 => "Flagged by 1 report".to_string(),
        n => format!("Flagged by {n} reports"),
    }
}

fn first_closest(doc: &dyn DocumentTree, node: NodeId, ordered: &[SelectorList]) -> Option<NodeId> {
    ordered.iter().find_map(|selector| doc.closest(node, selector))
}

fn first_within(doc: &dyn DocumentTree, node: NodeId, ordered: &[SelectorList]) -> Option<NodeId> {
    ordered.iter().find_map(|selector| doc.find_within(node, selector))
}

fn self_and_descendants(doc: &dyn DocumentTree, root: NodeId, selector: &SelectorList) -> Vec<NodeId> {
    let mut found = Vec::new();
    if doc.matches(root, selector) {
        found.push(root);
    }
    found.extend(doc.query_all(root, selector));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedguard_document::{el, MemoryDocument};
    use pretty_assertions::assert_eq;

    fn id(raw: &str) -> Identifier {
        Identifier::parse(raw).expect("identifier")
    }

    fn selector(raw: &str) -> SelectorList {
        SelectorList::parse(raw).expect("selector")
    }

    fn fixture() -> (Arc<MemoryDocument>, VisualStateApplier, NodeId) {
        let doc = Arc::new(MemoryDocument::new());
        let card = doc
            .insert(
                doc.root(),
                el("ytd-rich-item-renderer").child(
                    el("ytd-rich-grid-media").child(
                        el("ytd-thumbnail")
                            .child(el("a").attr("id", "thumbnail").attr("href", "/watch?v=AAAAAAAAAAA")),
                    ),
                ),
            )
            .expect("insert");
        let applier = VisualStateApplier::new(doc.clone(), MarkupTable::standard());
        (doc, applier, card)
    }

    #[test]
    fn annotate_twice_leaves_one_overlay() {
        let (doc, applier, card) = fixture();
        let media = doc.query_first(card, &selector("a#thumbnail")).expect("media");

        let first = applier.annotate(card, &id("AAAAAAAAAAA"), 3).expect("annotate");
        let AnnotateOutcome::Attached { badge, media: host, blurred } = first else {
            panic!("expected attach, got {first:?}");
        };
        assert_eq!(host, media);
        assert_eq!(doc.tag_name(blurred).as_deref(), Some("ytd-thumbnail"));
        assert!(doc.has_class(blurred, BLURRED_CLASS));
        assert_eq!(doc.style(media, "position").as_deref(), Some("relative"));

        let second = applier.annotate(card, &id("AAAAAAAAAAA"), 3).expect("annotate");
        assert_eq!(second, AnnotateOutcome::AlreadyAnnotated(badge));

        let badges = doc.query_all(card, &selector(".feedguard-badge"));
        assert_eq!(badges, vec![badge]);
        assert_eq!(doc.attribute(badge, BADGE_ID_ATTRIBUTE).as_deref(), Some("AAAAAAAAAAA"));
        assert_eq!(doc.attribute(badge, BADGE_COUNT_ATTRIBUTE).as_deref(), Some("3"));
        assert_eq!(doc.attribute(badge, "title").as_deref(), Some("Flagged by 3 reports"));
    }

    #[test]
    fn existing_positioning_is_kept() {
        let (doc, applier, card) = fixture();
        let media = doc.query_first(card, &selector("a#thumbnail")).expect("media");
        doc.set_style(media, "position", "absolute");
        applier.annotate(card, &id("AAAAAAAAAAA"), 1).expect("annotate");
        assert_eq!(doc.style(media, "position").as_deref(), Some("absolute"));
    }

    #[test]
    fn hide_targets_nearest_listed_container_and_clears_overlay() {
        let (doc, applier, card) = fixture();
        let link = doc.query_first(card, &selector("a")).expect("link");
        applier.annotate(card, &id("AAAAAAAAAAA"), 2).expect("annotate");
        assert_eq!(applier.state_of(card), VisualState::Annotated);

        let container = applier.hide(link).expect("hide");
        assert_eq!(container, card);
        assert!(doc.has_class(card, HIDDEN_CLASS));
        assert!(doc.query_first(card, &selector(".feedguard-badge")).is_none());
        assert!(doc.query_first(card, &selector(".feedguard-blurred")).is_none());
        assert_eq!(applier.state_of(card), VisualState::Hidden);

        // hidden items never receive an overlay
        assert_eq!(
            applier.annotate(card, &id("AAAAAAAAAAA"), 2).expect("annotate"),
            AnnotateOutcome::SkippedHidden
        );
        // idempotent
        assert_eq!(applier.hide(link).expect("hide"), card);
    }

    #[test]
    fn hide_falls_back_to_candidate() {
        let doc = Arc::new(MemoryDocument::new());
        let loose = doc.insert(doc.root(), el("section")).expect("insert");
        let applier = VisualStateApplier::new(doc.clone(), MarkupTable::standard());
        assert_eq!(applier.hide(loose).expect("hide"), loose);
        assert!(doc.has_class(loose, HIDDEN_CLASS));
    }

    #[test]
    fn stale_or_bare_candidates_are_container_not_found() {
        let (doc, applier, card) = fixture();
        let bare = doc.insert(doc.root(), el("ytd-video-renderer")).expect("insert");
        assert_eq!(
            applier.annotate(bare, &id("BBBBBBBBBBB"), 1),
            Err(ApplyError::ContainerNotFound(bare))
        );

        doc.remove(card);
        assert_eq!(applier.hide(card), Err(ApplyError::ContainerNotFound(card)));
        assert_eq!(
            applier.annotate(card, &id("AAAAAAAAAAA"), 1),
            Err(ApplyError::ContainerNotFound(card))
        );
    }

    #[test]
    fn reset_strips_every_marker() {
        let (doc, applier, card) = fixture();
        let other = doc
            .insert(doc.root(), el("ytd-video-renderer").child(el("a").attr("href", "/shorts/CCCCCCCCCCC")))
            .expect("insert");
        applier.annotate(card, &id("AAAAAAAAAAA"), 5).expect("annotate");
        applier.hide(other).expect("hide");

        let summary = applier.reset(doc.root());
        assert_eq!(
            summary,
            ResetSummary {
                badges: 1,
                hidden: 1,
                blurred: 1
            }
        );
        assert_eq!(applier.state_of(card), VisualState::Unmarked);
        assert_eq!(applier.state_of(other), VisualState::Unmarked);
        assert_eq!(applier.reset(doc.root()).total(), 0);
    }

    #[test]
    fn content_link_is_the_last_media_fallback() {
        let doc = Arc::new(MemoryDocument::new());
        let card = doc
            .insert(
                doc.root(),
                el("ytd-compact-video-renderer").child(el("a").attr("href", "/watch?v=DDDDDDDDDDD")),
            )
            .expect("insert");
        let link = doc.query_first(card, &selector("a")).expect("link");
        let applier = VisualStateApplier::new(doc.clone(), MarkupTable::standard());

        let outcome = applier.annotate(card, &id("DDDDDDDDDDD"), 1).expect("annotate");
        let AnnotateOutcome::Attached { media, blurred, badge } = outcome else {
            panic!("expected attach, got {outcome:?}");
        };
        assert_eq!(media, link);
        assert_eq!(blurred, link);
        assert_eq!(doc.attribute(badge, "title").as_deref(), Some("Flagged by 1 report"));
    }
}
