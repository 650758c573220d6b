//! The rewrite pipeline run over every query before evaluation.

mod ask;
mod filter_placement;
mod filtered_product;
mod implicit_join;
mod lazy;
mod reorder;
mod substitution;

pub use ask::AskSpecialization;
pub use filter_placement::FilterPlacement;
pub use filtered_product::FilteredProductRewrite;
pub use implicit_join::ImplicitJoin;
pub use lazy::LazySpecialization;
pub use reorder::ReorderBgp;
pub use substitution::{Replacement, VariableSubstitution};

use crate::query::{Query, QueryForm};
use crate::transform::Transformer;

pub struct Optimizer;

impl Optimizer {
    /// Runs the rules in their fixed order. Every rule leaves what it cannot
    /// prove safe to change untouched, so the pipeline is total.
    ///
    /// The order matters: reordering feeds filter placement (prefixes only
    /// make sense on sorted BGPs), the specializations must see the final
    /// pattern shapes, and the implicit-join rewrite deliberately skips the
    /// accept-all case the filtered-product rule picks up afterwards.
    pub fn optimize(query: &mut Query) {
        let mut pattern = ReorderBgp.transform(&query.pattern);
        pattern = FilterPlacement.transform(&pattern);
        if query.form == QueryForm::Ask {
            pattern = AskSpecialization.transform(&pattern);
        }
        if let Some(limit) = query.limit {
            pattern = LazySpecialization::new(query.offset + limit).transform(&pattern);
        }
        pattern = ImplicitJoin.transform(&pattern);
        pattern = FilteredProductRewrite.transform(&pattern);
        query.pattern = pattern;
    }
}
