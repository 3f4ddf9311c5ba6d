//! Structure detection: classifies lines of extracted page text as
//! Unit/Chapter/Section headings using an ordered rule table.
//!
//! Detection is purely heuristic pattern matching on the textual shape of
//! headings. False negatives are expected and acceptable: a missed heading
//! degrades a chunk to null context, never to a wrong page number. No
//! heading is ever inferred from body content.

use regex::Regex;

use crate::types::{HeadingLevel, HeadingRef, Page, StructuralContext, StructuralHeading};

/// Lines longer than this are body text, not headings.
const MAX_HEADING_LINE_CHARS: usize = 120;

/// A single typed matcher in the rule table.
///
/// Capture group 1 is the label, capture group 2 (optional) the title.
#[derive(Debug)]
pub struct HeadingRule {
    pub level: HeadingLevel,
    pattern: Regex,
}

impl HeadingRule {
    fn new(level: HeadingLevel, pattern: &str) -> Self {
        Self {
            level,
            pattern: Regex::new(pattern).expect("heading rule pattern must compile"),
        }
    }

    fn apply(&self, line: &str, page_number: u32) -> Option<StructuralHeading> {
        let captures = self.pattern.captures(line)?;
        let label = captures.get(1)?.as_str().trim().to_string();
        let title = captures
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|title| !title.is_empty())
            // Title extraction failed: fall back to the raw matched text.
            .unwrap_or_else(|| line.trim().to_string());
        Some(StructuralHeading {
            level: self.level,
            label,
            title,
            page_number,
        })
    }
}

/// The layered rule set, evaluated in fixed priority order: Unit patterns
/// first, then Chapter, then Section, so a line matching multiple levels is
/// classified by the coarsest rule.
pub struct StructureDetector {
    rules: Vec<HeadingRule>,
}

impl Default for StructureDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureDetector {
    pub fn new() -> Self {
        let rules = vec![
            HeadingRule::new(
                HeadingLevel::Unit,
                r"(?i)^\s*unit\s+([IVXLCDM]+|\d+)\s*[:.\-]?\s*(.*)$",
            ),
            HeadingRule::new(
                HeadingLevel::Chapter,
                r"(?i)^\s*chapter\s+(\d+)\s*[:.\-]?\s*(.*)$",
            ),
            HeadingRule::new(
                HeadingLevel::Section,
                r"(?i)^\s*section\s+(\d+(?:\.\d+)*)\s*[:.\-]?\s*(.*)$",
            ),
            // Bare numbered headings such as "4.2 Quantum Mechanics". The
            // title text is mandatory so stray numbers in prose do not match.
            HeadingRule::new(
                HeadingLevel::Section,
                r"^\s*(\d+\.\d+(?:\.\d+)*)\s+([A-Za-z][^.!?]*)$",
            ),
        ];
        Self { rules }
    }

    /// Scans pages of a single document, supplied in ascending page order,
    /// and returns detected headings ordered by page then by position within
    /// the page.
    ///
    /// Pure function over text; an empty page simply yields no headings.
    pub fn detect(&self, pages: &[Page]) -> Vec<StructuralHeading> {
        let mut headings = Vec::new();
        for page in pages {
            for line in page.raw_text.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.chars().count() > MAX_HEADING_LINE_CHARS {
                    continue;
                }
                if let Some(heading) = self
                    .rules
                    .iter()
                    .find_map(|rule| rule.apply(trimmed, page.page_number))
                {
                    headings.push(heading);
                }
            }
        }
        headings
    }
}

/// Detected headings of one document, queryable for per-page context.
#[derive(Clone, Debug, Default)]
pub struct Outline {
    headings: Vec<StructuralHeading>,
}

impl Outline {
    /// Wraps headings produced by [`StructureDetector::detect`]. Ordering is
    /// preserved as given; the detector already emits page order.
    pub fn new(headings: Vec<StructuralHeading>) -> Self {
        Self { headings }
    }

    pub fn headings(&self) -> &[StructuralHeading] {
        &self.headings
    }

    /// The most-recently-seen heading at each level on or before the page.
    /// Front matter before any heading gets an all-`None` context.
    pub fn context_for(&self, page_number: u32) -> StructuralContext {
        let mut context = StructuralContext::default();
        for heading in &self.headings {
            if heading.page_number > page_number {
                break;
            }
            let slot = match heading.level {
                HeadingLevel::Unit => &mut context.unit,
                HeadingLevel::Chapter => &mut context.chapter,
                HeadingLevel::Section => &mut context.section,
            };
            *slot = Some(HeadingRef::from(heading));
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> Page {
        Page::new("physics", number, text)
    }

    #[test]
    fn detects_unit_chapter_and_section_headings() {
        let pages = vec![
            page(1, "UNIT II: Waves and Optics\n\nIntroductory remarks."),
            page(10, "Chapter 4 - Quantum Physics\nSome body text."),
            page(112, "Section 4.2: Quantum Mechanics\nThe wave function evolves."),
        ];
        let headings = StructureDetector::new().detect(&pages);
        assert_eq!(headings.len(), 3);
        assert_eq!(headings[0].level, HeadingLevel::Unit);
        assert_eq!(headings[0].label, "II");
        assert_eq!(headings[0].title, "Waves and Optics");
        assert_eq!(headings[1].level, HeadingLevel::Chapter);
        assert_eq!(headings[1].label, "4");
        assert_eq!(headings[2].level, HeadingLevel::Section);
        assert_eq!(headings[2].label, "4.2");
        assert_eq!(headings[2].title, "Quantum Mechanics");
        assert_eq!(headings[2].page_number, 112);
    }

    #[test]
    fn bare_numbered_heading_matches_section_rule() {
        let pages = vec![page(31, "3.1 The Wave Equation")];
        let headings = StructureDetector::new().detect(&pages);
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].level, HeadingLevel::Section);
        assert_eq!(headings[0].label, "3.1");
        assert_eq!(headings[0].title, "The Wave Equation");
    }

    #[test]
    fn coarser_rule_wins_when_levels_overlap() {
        // "Unit 3" also resembles the chapter shape; the unit rule is
        // evaluated first and must win.
        let pages = vec![page(5, "Unit 3: Thermodynamics")];
        let headings = StructureDetector::new().detect(&pages);
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].level, HeadingLevel::Unit);
    }

    #[test]
    fn missing_title_falls_back_to_raw_line() {
        let pages = vec![page(7, "Chapter 2")];
        let headings = StructureDetector::new().detect(&pages);
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].label, "2");
        assert_eq!(headings[0].title, "Chapter 2");
    }

    #[test]
    fn body_text_and_empty_pages_yield_no_headings() {
        let pages = vec![
            page(1, ""),
            page(2, "The energy of a photon is 3.1 times larger in this setup."),
            page(3, &format!("Section 1.1 {}", "x".repeat(200))),
        ];
        let headings = StructureDetector::new().detect(&pages);
        assert!(headings.is_empty());
    }

    #[test]
    fn context_inherits_last_heading_per_level() {
        let pages = vec![
            page(1, "Unit I: Mechanics"),
            page(10, "Chapter 1: Kinematics"),
            page(20, "Section 1.3: Projectiles"),
            page(40, "Chapter 2: Dynamics"),
        ];
        let outline = Outline::new(StructureDetector::new().detect(&pages));

        let front = outline.context_for(0);
        assert!(front.is_empty());

        let mid = outline.context_for(25);
        assert_eq!(mid.unit.as_ref().unwrap().label, "I");
        assert_eq!(mid.chapter.as_ref().unwrap().label, "1");
        assert_eq!(mid.section.as_ref().unwrap().label, "1.3");

        // Chapter 2 replaces chapter context; stale section context from
        // chapter 1 is still the most recent section seen.
        let later = outline.context_for(45);
        assert_eq!(later.chapter.as_ref().unwrap().label, "2");
    }

    #[test]
    fn context_is_monotonic_across_pages() {
        let pages = vec![
            page(1, "Chapter 1: Kinematics"),
            page(30, "Chapter 2: Dynamics"),
            page(60, "Chapter 3: Energy"),
        ];
        let outline = Outline::new(StructureDetector::new().detect(&pages));
        let mut previous: Option<String> = None;
        for page_number in 1..=70 {
            let label = outline
                .context_for(page_number)
                .chapter
                .map(|chapter| chapter.label);
            if let (Some(prev), Some(current)) = (&previous, &label) {
                assert!(prev <= current, "chapter label regressed at page {page_number}");
            }
            if label.is_some() {
                previous = label;
            }
        }
    }
}
