use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

pub const HANDLE_PREFIX: &str = "blob:sod/";

/// Opaque handle the shell resolves to displayable image bytes.
///
/// Handles are minted by the core and never reused, so selecting the same file
/// twice yields two distinct handles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    #[must_use]
    pub fn mint() -> Self {
        Self(format!("{HANDLE_PREFIX}{}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag carried by every upload request so completions can be matched to the
/// upload that started them.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// View state of the upload workflow.
///
/// Histories are most-recent-first. They only ever grow inside
/// [`Session::begin_upload`], and always in the same transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    current_input: Option<ImageRef>,
    current_output: Option<ImageRef>,
    loading: bool,
    input_history: VecDeque<ImageRef>,
    output_history: VecDeque<ImageRef>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current_input(&self) -> Option<&ImageRef> {
        self.current_input.as_ref()
    }

    #[must_use]
    pub fn current_output(&self) -> Option<&ImageRef> {
        self.current_output.as_ref()
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// The processing indicator is only meaningful next to an input image.
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.loading && self.current_input.is_some()
    }

    #[must_use]
    pub fn input_history(&self) -> &VecDeque<ImageRef> {
        &self.input_history
    }

    #[must_use]
    pub fn output_history(&self) -> &VecDeque<ImageRef> {
        &self.output_history
    }

    /// Moves the displayed images into history and shows `input` in their place.
    ///
    /// Returns the handles pushed off the end of either history by
    /// `history_limit`; the caller owns releasing them.
    #[must_use = "evicted handles must be released"]
    pub fn begin_upload(&mut self, input: ImageRef, history_limit: Option<usize>) -> Vec<ImageRef> {
        if let Some(previous) = self.current_input.take() {
            self.input_history.push_front(previous);
        }
        if let Some(previous) = self.current_output.take() {
            self.output_history.push_front(previous);
        }

        self.current_input = Some(input);
        self.loading = true;

        let mut evicted = Vec::new();
        if let Some(limit) = history_limit {
            truncate_into(&mut self.input_history, limit, &mut evicted);
            truncate_into(&mut self.output_history, limit, &mut evicted);
        }
        evicted
    }

    /// Shows `output`. Returns the output it replaced, which only happens when
    /// completions are applied out of order.
    #[must_use = "a replaced handle must be released"]
    pub fn complete(&mut self, output: ImageRef) -> Option<ImageRef> {
        self.current_output.replace(output)
    }

    pub fn finish(&mut self) {
        self.loading = false;
    }

    /// Empties the session, handing back every handle it referenced.
    #[must_use = "drained handles must be released"]
    pub fn drain(&mut self) -> Vec<ImageRef> {
        let session = std::mem::take(self);
        session
            .current_input
            .into_iter()
            .chain(session.current_output)
            .chain(session.input_history)
            .chain(session.output_history)
            .collect()
    }
}

fn truncate_into(history: &mut VecDeque<ImageRef>, limit: usize, evicted: &mut Vec<ImageRef>) {
    while history.len() > limit {
        if let Some(handle) = history.pop_back() {
            evicted.push(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_session_is_empty() {
        let session = Session::new();
        assert!(session.current_input().is_none());
        assert!(session.current_output().is_none());
        assert!(!session.is_loading());
        assert!(session.input_history().is_empty());
        assert!(session.output_history().is_empty());
    }

    #[test]
    fn first_upload_leaves_history_empty() {
        let mut session = Session::new();
        let a = ImageRef::mint();

        let evicted = session.begin_upload(a.clone(), None);

        assert!(evicted.is_empty());
        assert_eq!(session.current_input(), Some(&a));
        assert!(session.current_output().is_none());
        assert!(session.is_loading());
        assert!(session.input_history().is_empty());
        assert!(session.output_history().is_empty());
    }

    #[test]
    fn second_upload_snapshots_previous_pair() {
        let mut session = Session::new();
        let a = ImageRef::mint();
        let out1 = ImageRef::mint();
        let b = ImageRef::mint();

        let _ = session.begin_upload(a.clone(), None);
        assert!(session.complete(out1.clone()).is_none());
        session.finish();
        let _ = session.begin_upload(b.clone(), None);

        assert_eq!(session.current_input(), Some(&b));
        assert!(session.current_output().is_none());
        assert!(session.is_loading());
        assert_eq!(session.input_history().iter().collect::<Vec<_>>(), vec![&a]);
        assert_eq!(session.output_history().iter().collect::<Vec<_>>(), vec![&out1]);
    }

    #[test]
    fn failed_upload_leaves_histories_uneven() {
        let mut session = Session::new();
        let _ = session.begin_upload(ImageRef::mint(), None);
        session.finish();
        let _ = session.begin_upload(ImageRef::mint(), None);

        assert_eq!(session.input_history().len(), 1);
        assert!(session.output_history().is_empty());
    }

    #[test]
    fn processing_requires_input() {
        let mut session = Session::new();
        session.loading = true;
        assert!(!session.is_processing());

        let _ = session.begin_upload(ImageRef::mint(), None);
        assert!(session.is_processing());
        session.finish();
        assert!(!session.is_processing());
    }

    #[test]
    fn history_limit_evicts_oldest() {
        let mut session = Session::new();
        let handles: Vec<ImageRef> = (0..4).map(|_| ImageRef::mint()).collect();

        let mut evicted = Vec::new();
        for handle in &handles {
            evicted.extend(session.begin_upload(handle.clone(), Some(2)));
        }

        assert_eq!(evicted, vec![handles[0].clone()]);
        assert_eq!(
            session.input_history().iter().collect::<Vec<_>>(),
            vec![&handles[2], &handles[1]]
        );
    }

    #[test]
    fn drain_returns_every_handle() {
        let mut session = Session::new();
        let a = ImageRef::mint();
        let out = ImageRef::mint();
        let b = ImageRef::mint();
        let _ = session.begin_upload(a.clone(), None);
        let _ = session.complete(out.clone());
        let _ = session.begin_upload(b.clone(), None);

        let drained = session.drain();

        assert_eq!(drained.len(), 3);
        for handle in [&a, &out, &b] {
            assert!(drained.contains(handle));
        }
        assert_eq!(session, Session::new());
    }

    #[test]
    fn minted_handles_are_distinct() {
        let a = ImageRef::mint();
        let b = ImageRef::mint();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with(HANDLE_PREFIX));
    }

    #[test]
    fn generation_saturates() {
        assert_eq!(Generation(1).next(), Generation(2));
        assert_eq!(Generation(u64::MAX).next(), Generation(u64::MAX));
    }

    proptest! {
        #[test]
        fn history_tracks_superseded_inputs(outcomes in proptest::collection::vec(any::<bool>(), 1..40)) {
            let mut session = Session::new();
            let mut inputs = Vec::new();
            let mut produced = 0usize;

            for (n, succeeded) in outcomes.iter().enumerate() {
                let input = ImageRef::mint();
                inputs.push(input.clone());
                let evicted = session.begin_upload(input, None);
                prop_assert!(evicted.is_empty());
                prop_assert_eq!(session.input_history().len(), n);

                if n > 0 {
                    prop_assert_eq!(session.input_history().front(), Some(&inputs[n - 1]));
                }
                if *succeeded {
                    let _ = session.complete(ImageRef::mint());
                    produced += 1;
                }
                session.finish();
            }

            let superseded_outputs = produced - usize::from(session.current_output().is_some());
            prop_assert_eq!(session.output_history().len(), superseded_outputs);
            prop_assert!(session.output_history().len() <= session.input_history().len());
        }

        #[test]
        fn capped_history_never_exceeds_limit(uploads in 1usize..40, limit in 1usize..8) {
            let mut session = Session::new();
            let mut evicted = 0usize;

            for _ in 0..uploads {
                evicted += session.begin_upload(ImageRef::mint(), Some(limit)).len();
                let _ = session.complete(ImageRef::mint());
                session.finish();
                prop_assert!(session.input_history().len() <= limit);
                prop_assert!(session.output_history().len() <= limit);
            }

            let superseded = uploads - 1;
            let retained = session.input_history().len() + session.output_history().len();
            prop_assert_eq!(evicted + retained, superseded * 2);
        }
    }
}
