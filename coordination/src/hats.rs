//! The six hats: a closed set of participants with fixed static data.
//!
//! | Hat    | Role       | Phase                 |
//! |--------|------------|-----------------------|
//! | White  | facts      | parallel (mandatory)  |
//! | Red    | emotions   | parallel              |
//! | Yellow | benefits   | parallel              |
//! | Black  | risks      | parallel              |
//! | Green  | creativity | sequential            |
//! | Blue   | synthesis  | synthesis, no lookups |
//!
//! Declaration order is significant: it is the iteration order of every
//! `BTreeMap<Hat, _>` and therefore the tie-break order of the allocator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::Topic;
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hat {
    White,
    Red,
    Yellow,
    Black,
    Green,
    Blue,
}

impl Hat {
    pub const ALL: [Hat; 6] = [
        Hat::White,
        Hat::Red,
        Hat::Yellow,
        Hat::Black,
        Hat::Green,
        Hat::Blue,
    ];

    /// Hats processed concurrently in the first wave.
    pub const PARALLEL: [Hat; 4] = [Hat::White, Hat::Red, Hat::Yellow, Hat::Black];

    /// Always searches when any lookup is allocated.
    pub const FACTS: Hat = Hat::White;
    /// Runs after aggregation, may issue one sequential lookup.
    pub const CREATIVE: Hat = Hat::Green;
    /// Produces the final output, never searches.
    pub const SYNTHESIS: Hat = Hat::Blue;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Black => "black",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }

    /// Capitalized colour name, e.g. `White`.
    pub fn title(self) -> &'static str {
        match self {
            Self::White => "White",
            Self::Red => "Red",
            Self::Yellow => "Yellow",
            Self::Black => "Black",
            Self::Green => "Green",
            Self::Blue => "Blue",
        }
    }

    /// Short display label used in rationales, e.g. `White (Facts)`.
    pub fn short_label(self) -> &'static str {
        match self {
            Self::White => "White (Facts)",
            Self::Red => "Red (Emotions)",
            Self::Yellow => "Yellow (Benefits)",
            Self::Black => "Black (Risks)",
            Self::Green => "Green (Creativity)",
            Self::Blue => "Blue (Process)",
        }
    }

    /// Heading label used in rendered contexts, e.g. `White Hat (Facts)`.
    pub fn label(self) -> &'static str {
        match self {
            Self::White => "White Hat (Facts)",
            Self::Red => "Red Hat (Emotions)",
            Self::Yellow => "Yellow Hat (Benefits)",
            Self::Black => "Black Hat (Risks)",
            Self::Green => "Green Hat (Creativity)",
            Self::Blue => "Blue Hat (Process)",
        }
    }

    pub fn role(self) -> &'static str {
        match self {
            Self::White => "facts",
            Self::Red => "emotions",
            Self::Yellow => "benefits",
            Self::Black => "risks",
            Self::Green => "creativity",
            Self::Blue => "synthesis",
        }
    }

    pub fn preamble(self) -> &'static str {
        match self {
            Self::White => prompts::WHITE_PREAMBLE,
            Self::Red => prompts::RED_PREAMBLE,
            Self::Yellow => prompts::YELLOW_PREAMBLE,
            Self::Black => prompts::BLACK_PREAMBLE,
            Self::Green => prompts::GREEN_PREAMBLE,
            Self::Blue => prompts::BLUE_PREAMBLE,
        }
    }

    pub fn is_parallel(self) -> bool {
        Self::PARALLEL.contains(&self)
    }

    /// Terms appended to the user query to build this hat's lookup string.
    ///
    /// Red, Yellow, and Black tailor their vocabulary to the topic; the
    /// others use a fixed suffix.
    pub fn query_terms(self, topic: Topic) -> &'static str {
        match (self, topic) {
            (Self::White, _) => "facts statistics data research",

            (Self::Red, Topic::Emotional) => "reactions opinions feelings response",
            (Self::Red, Topic::Social) => "public opinion social response reactions",
            (Self::Red, Topic::Health) => "patient experiences emotional impact",
            (Self::Red, Topic::Business) => "customer reviews business sentiment",
            (Self::Red, Topic::Technology) => "user experience community feedback",
            (Self::Red, _) => "opinion reaction sentiment response",

            (Self::Yellow, Topic::Business) => {
                "business benefits advantages opportunities success case studies"
            }
            (Self::Yellow, Topic::Health) => "health benefits positive outcomes improvements",
            (Self::Yellow, Topic::Technology) => {
                "innovation benefits technological advantages improvements"
            }
            (Self::Yellow, Topic::General) => "benefits advantages opportunities positive aspects",
            (Self::Yellow, _) => "benefits advantages opportunities",

            (Self::Black, Topic::Health) => "health risks side effects dangers problems",
            (Self::Black, Topic::Safety) => "safety risks hazards dangers warnings",
            (Self::Black, Topic::Business) => "business risks challenges problems failures",
            (Self::Black, Topic::Technology) => "technology risks cybersecurity threats problems",
            (Self::Black, Topic::General) => "risks problems challenges limitations",
            (Self::Black, _) => "risks problems challenges",

            (Self::Green, _) => "creative solutions alternatives innovation new approaches",
            (Self::Blue, _) => "best practices framework methodology",
        }
    }

    /// Full lookup string for this hat: `"{query} {terms}"`.
    pub fn lookup_query(self, query: &str, topic: Topic) -> String {
        format!("{} {}", query.trim(), self.query_terms(topic))
    }

    /// Fallback text when this hat could not produce a perspective.
    pub fn placeholder_text(self) -> String {
        format!("Error: Unable to process {} perspective.", self.label())
    }
}

impl fmt::Display for Hat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        let key = key.strip_suffix("_hat").unwrap_or(&key);
        Hat::ALL
            .into_iter()
            .find(|h| h.as_str() == key)
            .ok_or_else(|| format!("unknown hat '{s}'"))
    }
}
