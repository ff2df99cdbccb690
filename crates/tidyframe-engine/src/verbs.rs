use crate::arrange::{arrange_table, SortKey};
use crate::concurrency::ConcurrencyOptions;
use crate::error::FrameResult;
use crate::grouped::{distinct_rows, GroupedTable};
use crate::join::{asof_join, join, AsofSpec, JoinKind, JoinSpec};
use crate::mutate::{filter_stage, mutate_stage, Filter, Mutate};
use crate::pivot::{pivot_longer, pivot_wider, PivotLongerSpec, PivotWiderSpec};
use crate::stage::StageOutput;
use crate::summarise::{count_rows, summarise_stage, Summary};
use tidyframe_columnar::Table;

/// Relational verbs on an ungrouped table. An ungrouped table behaves as one group holding every
/// row.
pub trait TableVerbs {
    fn group_by<S: AsRef<str>>(&self, keys: &[S]) -> FrameResult<GroupedTable>;
    fn mutate(&self, mutate: &Mutate) -> FrameResult<StageOutput<Table>>;
    fn filter(&self, filter: &Filter) -> FrameResult<StageOutput<Table>>;
    fn summarise(&self, summaries: &[Summary]) -> FrameResult<StageOutput<Table>>;
    fn summarise_with(
        &self,
        summaries: &[Summary],
        options: &ConcurrencyOptions,
    ) -> FrameResult<StageOutput<Table>>;
    fn count(&self) -> FrameResult<Table>;
    fn arrange(&self, keys: &[SortKey]) -> FrameResult<Table>;
    fn distinct<S: AsRef<str>>(&self, columns: &[S]) -> FrameResult<Table>;

    fn join(&self, right: &Table, spec: &JoinSpec) -> FrameResult<Table>;
    fn asof_join(&self, right: &Table, spec: &AsofSpec) -> FrameResult<Table>;
    fn pivot_wider(&self, spec: &PivotWiderSpec) -> FrameResult<Table>;
    fn pivot_longer(&self, spec: &PivotLongerSpec) -> FrameResult<Table>;

    fn inner_join(&self, right: &Table, spec: JoinSpec) -> FrameResult<Table> {
        self.join(right, &spec.kind(JoinKind::Inner))
    }

    fn left_join(&self, right: &Table, spec: JoinSpec) -> FrameResult<Table> {
        self.join(right, &spec.kind(JoinKind::Left))
    }

    fn right_join(&self, right: &Table, spec: JoinSpec) -> FrameResult<Table> {
        self.join(right, &spec.kind(JoinKind::Right))
    }

    fn outer_join(&self, right: &Table, spec: JoinSpec) -> FrameResult<Table> {
        self.join(right, &spec.kind(JoinKind::Outer))
    }

    fn cross_join(&self, right: &Table) -> FrameResult<Table> {
        self.join(right, &JoinSpec::cross())
    }
}

impl TableVerbs for Table {
    fn group_by<S: AsRef<str>>(&self, keys: &[S]) -> FrameResult<GroupedTable> {
        GroupedTable::new(self.clone(), keys)
    }

    fn mutate(&self, mutate: &Mutate) -> FrameResult<StageOutput<Table>> {
        mutate_stage(self, None, mutate)
    }

    fn filter(&self, filter: &Filter) -> FrameResult<StageOutput<Table>> {
        filter_stage(self, None, filter)
    }

    fn summarise(&self, summaries: &[Summary]) -> FrameResult<StageOutput<Table>> {
        summarise_stage(self, None, summaries, &ConcurrencyOptions::default())
    }

    fn summarise_with(
        &self,
        summaries: &[Summary],
        options: &ConcurrencyOptions,
    ) -> FrameResult<StageOutput<Table>> {
        summarise_stage(self, None, summaries, options)
    }

    fn count(&self) -> FrameResult<Table> {
        count_rows(self, None)
    }

    fn arrange(&self, keys: &[SortKey]) -> FrameResult<Table> {
        arrange_table(self, keys)
    }

    fn distinct<S: AsRef<str>>(&self, columns: &[S]) -> FrameResult<Table> {
        distinct_rows(self, columns)
    }

    fn join(&self, right: &Table, spec: &JoinSpec) -> FrameResult<Table> {
        join(self, right, spec)
    }

    fn asof_join(&self, right: &Table, spec: &AsofSpec) -> FrameResult<Table> {
        asof_join(self, right, spec)
    }

    fn pivot_wider(&self, spec: &PivotWiderSpec) -> FrameResult<Table> {
        pivot_wider(self, spec)
    }

    fn pivot_longer(&self, spec: &PivotLongerSpec) -> FrameResult<Table> {
        pivot_longer(self, spec)
    }
}
