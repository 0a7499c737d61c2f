//! HTML5-style document outline
//!
//! Built from a sectioning-content or sectioning-root node by a single
//! depth-first walk. Sections are stored in an arena owned by the
//! [`Outline`] and addressed by [`SectionId`].
//!
//! Heading ranks are compared as plain numbers: `h1`..`h9` rank as their
//! digit, `hgroup` as the smallest positive rank among its heading children,
//! and every other heading element as `-1`. A smaller number is a higher
//! rank.

use crate::{NodeId, Presentation, TreeVisitor, XmlProperty};
use std::collections::HashMap;
use std::sync::Arc;

const SECTIONING_CONTENT: &[&str] = &["section", "article", "aside", "nav"];
const SECTIONING_ROOT: &[&str] = &["blockquote", "figure", "details", "fieldset", "td", "body"];
const HEADING: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "hgroup", "hd", "levelhd", "doctitle",
];

fn is_one_of(names: &[&str], local_name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(local_name))
}

/// Rank encoded in an `h1`..`h9` name
fn numbered_rank(local_name: &str) -> Option<i32> {
    let bytes = local_name.as_bytes();
    match bytes {
        [h, digit @ b'1'..=b'9'] if h.eq_ignore_ascii_case(&b'h') => Some(i32::from(digit - b'0')),
        _ => None,
    }
}

/// Handle of a section inside an [`Outline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(usize);

/// One section of an outline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: Option<NodeId>,
    /// The sectioning element that opened this section
    pub real_sectioning_root_or_content: NodeId,
    pub sub_sections: Vec<SectionId>,
    pub parent: Option<SectionId>,
}

/// Result of outlining one outlinee
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    sections: Vec<Section>,
    roots: Vec<SectionId>,
}

impl Outline {
    /// Top-level sections in document order
    pub fn roots(&self) -> &[SectionId] {
        &self.roots
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    /// Sections reachable from the roots, preorder, with their depth
    pub fn walk(&self) -> Vec<(SectionId, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<(SectionId, usize)> = self.roots.iter().rev().map(|r| (*r, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            if let Some(section) = self.section(id) {
                stack.extend(section.sub_sections.iter().rev().map(|s| (*s, depth + 1)));
            }
        }
        out
    }

    /// Number of sections reachable from the roots
    pub fn len(&self) -> usize {
        self.walk().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Flattened text of a section's heading
    pub fn heading_text(&self, pres: &Presentation, id: SectionId) -> Option<String> {
        pres.get_text_flattened(self.section(id)?.heading?)
    }
}

/// Walk state of the outline algorithm
struct OutlineBuilder {
    sections: Vec<Section>,
    outlines: HashMap<NodeId, Vec<SectionId>>,
    current_outlinee: Option<NodeId>,
    current_section: Option<SectionId>,
    stack: Vec<NodeId>,
}

impl OutlineBuilder {
    fn new() -> Self {
        Self {
            sections: Vec::new(),
            outlines: HashMap::new(),
            current_outlinee: None,
            current_section: None,
            stack: Vec::new(),
        }
    }

    fn new_section(&mut self, opener: NodeId, heading: Option<NodeId>, parent: Option<SectionId>) -> SectionId {
        let id = SectionId(self.sections.len());
        self.sections.push(Section {
            heading,
            real_sectioning_root_or_content: opener,
            sub_sections: Vec::new(),
            parent,
        });
        if let Some(parent) = parent {
            self.sections[parent.0].sub_sections.push(id);
        }
        id
    }

    fn last_top_level(&self, outlinee: NodeId) -> Option<SectionId> {
        self.outlines.get(&outlinee).and_then(|list| list.last().copied())
    }

    /// Rank of a section's heading; a section without one outranks everything
    fn section_rank(&self, pres: &Presentation, id: SectionId) -> i32 {
        self.sections[id.0]
            .heading
            .map_or(i32::MIN, |h| pres.heading_rank(h))
    }

    fn top_is_heading(&self, pres: &Presentation) -> bool {
        self.stack.last().is_some_and(|top| pres.is_heading(*top))
    }

    fn enter_heading(&mut self, pres: &Presentation, node: NodeId, outlinee: NodeId) {
        let Some(current) = self.current_section else {
            return;
        };
        if self.sections[current.0].heading.is_none() {
            self.sections[current.0].heading = Some(node);
            self.stack.push(node);
            return;
        }

        let rank = pres.heading_rank(node);
        let opens_top_level = self
            .last_top_level(outlinee)
            .is_some_and(|last| rank <= self.section_rank(pres, last));

        if opens_top_level {
            let section = self.new_section(outlinee, Some(node), None);
            self.outlines.entry(outlinee).or_default().push(section);
            self.current_section = Some(section);
        } else {
            let mut candidate = Some(current);
            while let Some(c) = candidate {
                if rank > self.section_rank(pres, c) {
                    break;
                }
                candidate = self.sections[c.0].parent;
            }
            let section = match candidate {
                Some(parent) => self.new_section(outlinee, Some(node), Some(parent)),
                None => {
                    let section = self.new_section(outlinee, Some(node), None);
                    self.outlines.entry(outlinee).or_default().push(section);
                    section
                }
            };
            self.current_section = Some(section);
        }
        self.stack.push(node);
    }

    fn exit_outlinee(&mut self, pres: &Presentation, node: NodeId) {
        let Some(resumed) = self.stack.pop() else {
            return;
        };
        self.current_outlinee = Some(resumed);
        self.current_section = self.last_top_level(resumed);

        if pres.is_sectioning_content(node) {
            let (Some(target), Some(exited)) = (self.current_section, self.outlines.get(&node).cloned()) else {
                return;
            };
            for section in exited {
                self.sections[section.0].parent = Some(target);
                self.sections[target.0].sub_sections.push(section);
            }
        } else {
            while let Some(current) = self.current_section {
                match self.sections[current.0].sub_sections.last() {
                    Some(last) => self.current_section = Some(*last),
                    None => break,
                }
            }
        }
    }

    fn finish(self, outlinee: NodeId) -> Outline {
        Outline {
            roots: self.outlines.get(&outlinee).cloned().unwrap_or_default(),
            sections: self.sections,
        }
    }
}

impl TreeVisitor for OutlineBuilder {
    fn pre_visit(&mut self, pres: &Presentation, node: NodeId) -> bool {
        if self.top_is_heading(pres) {
            return true;
        }

        if pres.is_outlinee(node) {
            if let Some(previous) = self.current_outlinee {
                self.stack.push(previous);
            }
            self.current_outlinee = Some(node);
            let section = self.new_section(node, None, None);
            self.outlines.insert(node, vec![section]);
            self.current_section = Some(section);
        } else if let Some(outlinee) = self.current_outlinee {
            if pres.is_heading(node) {
                self.enter_heading(pres, node, outlinee);
            }
        }
        true
    }

    fn post_visit(&mut self, pres: &Presentation, node: NodeId) {
        if self.stack.last() == Some(&node) {
            self.stack.pop();
        } else if !self.top_is_heading(pres) && pres.is_outlinee(node) && !self.stack.is_empty() {
            self.exit_outlinee(pres, node);
        }
    }
}

impl Presentation {
    fn element_name(&self, id: NodeId) -> Option<&str> {
        self.get_property::<XmlProperty>(id)
            .map(|x| x.local_name.as_str())
    }

    pub fn is_sectioning_content(&self, id: NodeId) -> bool {
        self.element_name(id)
            .is_some_and(|n| is_one_of(SECTIONING_CONTENT, n))
    }

    pub fn is_sectioning_root(&self, id: NodeId) -> bool {
        self.element_name(id)
            .is_some_and(|n| is_one_of(SECTIONING_ROOT, n))
    }

    /// Sectioning content or sectioning root
    pub fn is_outlinee(&self, id: NodeId) -> bool {
        self.is_sectioning_content(id) || self.is_sectioning_root(id)
    }

    pub fn is_heading(&self, id: NodeId) -> bool {
        self.element_name(id).is_some_and(|n| is_one_of(HEADING, n))
    }

    /// Numeric heading rank, `-1` when the node has none
    pub fn heading_rank(&self, id: NodeId) -> i32 {
        let Some(name) = self.element_name(id) else {
            return -1;
        };
        if let Some(rank) = numbered_rank(name) {
            return rank;
        }
        if name.eq_ignore_ascii_case("hgroup") {
            return self
                .children(id)
                .iter()
                .filter(|c| self.is_heading(**c))
                .map(|c| self.heading_rank(*c))
                .filter(|r| *r > 0)
                .min()
                .unwrap_or(-1);
        }
        -1
    }

    /// Outline of a sectioning element, `None` when `id` is not one
    ///
    /// Results are cached until the next change to the presentation.
    pub fn build_outline(&self, id: NodeId) -> Option<Arc<Outline>> {
        if !self.contains(id) || !self.is_outlinee(id) {
            return None;
        }
        if let Some(cached) = self.outlines.borrow().get(&id) {
            return Some(Arc::clone(cached));
        }

        let mut builder = OutlineBuilder::new();
        self.accept_depth_first(id, &mut builder);
        let outline = Arc::new(builder.finish(id));
        tracing::debug!(outlinee = %id, sections = outline.len(), "built outline");

        self.outlines.borrow_mut().insert(id, Arc::clone(&outline));
        Some(outline)
    }
}
