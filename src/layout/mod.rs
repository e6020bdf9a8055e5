//! Page-independent layout logic: grouping fragments, fitting text into
//! boxes and splitting a translation back across its source fragments.

mod distribute;
mod fit;
mod group;
mod wrap;

pub use distribute::distribute_words;
pub use fit::{FitConfig, FitError, FitOutcome, FitRequest, fit};
pub use group::{ContentClass, GroupConfig, TranslatableUnit, classify, group_line};
pub use wrap::{LINE_HEIGHT, lines_fit, wrap_text};
