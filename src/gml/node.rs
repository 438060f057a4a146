//! Namespace-agnostic element and attribute lookup.
//!
//! CityGML providers bind the same schema to different prefixes and, in older
//! exports, to different namespace URIs. Everything downstream therefore looks
//! elements up by local name only and never by a hardcoded namespace.

/// Capability set the geometry extraction needs from an XML tree.
pub trait GmlNode: Copy {
    /// Local (unprefixed) element name. Empty for non-element nodes.
    fn local_name(&self) -> &str;

    /// This node and all element descendants in document order whose local
    /// name is `local`, in any namespace. Comments and text are never matched.
    fn descendants_named(self, local: &str) -> impl Iterator<Item = Self>;

    /// Direct element children whose local name is `local`.
    fn children_named(self, local: &str) -> impl Iterator<Item = Self>;

    /// Attribute lookup: an exact unqualified key first, then any attribute
    /// whose local name matches (`{ns}local`).
    fn attribute_any_ns(&self, local: &str) -> Option<&str>;

    /// Concatenated text content of the subtree, separated by spaces.
    fn text_content(&self) -> String;

    /// First element descendant with the given local name, if any.
    #[inline]
    fn find(self, local: &str) -> Option<Self> {
        self.descendants_named(local).next()
    }

    /// The `gml:id` of this element.
    #[inline]
    fn gml_id(&self) -> Option<&str> {
        self.attribute_any_ns("id")
    }

    /// The `srsDimension` attribute parsed as an integer.
    #[inline]
    fn srs_dimension(&self) -> Option<u8> {
        self.attribute_any_ns("srsDimension").and_then(|v| v.trim().parse().ok())
    }
}

impl<'a, 'input: 'a> GmlNode for roxmltree::Node<'a, 'input> {
    #[inline]
    fn local_name(&self) -> &str {
        if self.is_element() { self.tag_name().name() } else { "" }
    }

    fn descendants_named(self, local: &str) -> impl Iterator<Item = Self> {
        self.descendants().filter(move |node| node.is_element() && node.tag_name().name() == local)
    }

    fn children_named(self, local: &str) -> impl Iterator<Item = Self> {
        self.children().filter(move |node| node.is_element() && node.tag_name().name() == local)
    }

    fn attribute_any_ns(&self, local: &str) -> Option<&str> {
        self.attribute(local).or_else(|| {
            self.attributes()
                .find(|attr| attr.name() == local)
                .map(|attr| attr.value())
        })
    }

    fn text_content(&self) -> String {
        self.descendants()
            .filter(|node| node.is_text())
            .filter_map(|node| node.text())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
