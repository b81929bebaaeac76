//! Identifier extraction strategies
//!
//! Five strategies in fallback order, fastest and most specific first:
//! 1. IdentityAttribute - identity attribute on the element itself
//! 2. SelfLink - the element is a content link
//! 3. DescendantLink - first content link under the element
//! 4. DescendantAttribute - first descendant carrying the identity attribute
//! 5. AncestorAttribute - nearest ancestor carrying the identity attribute

use feedguard_core_types::{Identifier, NodeId};
use feedguard_document::DocumentTree;

use crate::address::identifier_from_address;
use crate::markup::MarkupTable;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ExtractStrategy {
    IdentityAttribute,
    SelfLink,
    DescendantLink,
    DescendantAttribute,
    AncestorAttribute,
}

const FALLBACK_CHAIN: &[ExtractStrategy] = &[
    ExtractStrategy::IdentityAttribute,
    ExtractStrategy::SelfLink,
    ExtractStrategy::DescendantLink,
    ExtractStrategy::DescendantAttribute,
    ExtractStrategy::AncestorAttribute,
];

impl ExtractStrategy {
    pub fn fallback_chain() -> &'static [ExtractStrategy] {
        FALLBACK_CHAIN
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtractStrategy::IdentityAttribute => "identity-attribute",
            ExtractStrategy::SelfLink => "self-link",
            ExtractStrategy::DescendantLink => "descendant-link",
            ExtractStrategy::DescendantAttribute => "descendant-attribute",
            ExtractStrategy::AncestorAttribute => "ancestor-attribute",
        }
    }

    /// Runs this single strategy. Off-format values count as no answer.
    pub fn extract<D>(&self, doc: &D, node: NodeId, markup: &MarkupTable) -> Option<Identifier>
    where
        D: DocumentTree + ?Sized,
    {
        match self {
            ExtractStrategy::IdentityAttribute => doc
                .attribute(node, &markup.identity_attribute)
                .and_then(|value| Identifier::recognize(&value)),
            ExtractStrategy::SelfLink => {
                if !doc.matches(node, &markup.content_link) {
                    return None;
                }
                link_identifier(doc, node)
            }
            ExtractStrategy::DescendantLink => doc
                .query_first(node, &markup.content_link)
                .and_then(|link| link_identifier(doc, link)),
            ExtractStrategy::DescendantAttribute => doc
                .query_first(node, &markup.identity_carrier)
                .and_then(|carrier| doc.attribute(carrier, &markup.identity_attribute))
                .and_then(|value| Identifier::recognize(&value)),
            ExtractStrategy::AncestorAttribute => doc
                .parent(node)
                .and_then(|parent| doc.closest(parent, &markup.identity_carrier))
                .and_then(|carrier| doc.attribute(carrier, &markup.identity_attribute))
                .and_then(|value| Identifier::recognize(&value)),
        }
    }
}

fn link_identifier<D>(doc: &D, link: NodeId) -> Option<Identifier>
where
    D: DocumentTree + ?Sized,
{
    doc.attribute(link, "href")
        .and_then(|href| identifier_from_address(&href))
}

/// Walks the fallback chain; the first strategy yielding a well-formed
/// identifier wins.
pub fn extract_identifier<D>(
    doc: &D,
    node: NodeId,
    markup: &MarkupTable,
) -> Option<(ExtractStrategy, Identifier)>
where
    D: DocumentTree + ?Sized,
{
    ExtractStrategy::fallback_chain()
        .iter()
        .find_map(|strategy| strategy.extract(doc, node, markup).map(|id| (*strategy, id)))
}
