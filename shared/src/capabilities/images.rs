use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};

use crate::session::ImageRef;

/// Requests to the shell's registry of displayable images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageOperation {
    /// Back `handle` with `bytes` so the view can display it.
    Register {
        handle: ImageRef,
        mime: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },
    /// `handle` is no longer referenced by the view.
    Release { handle: ImageRef },
}

impl Operation for ImageOperation {
    type Output = ();
}

#[derive(Capability)]
pub struct Images<Ev> {
    context: CapabilityContext<ImageOperation, Ev>,
}

impl<Ev> Images<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<ImageOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn register(&self, handle: &ImageRef, mime: impl Into<String>, bytes: Vec<u8>) {
        self.notify(ImageOperation::Register {
            handle: handle.clone(),
            mime: mime.into(),
            bytes,
        });
    }

    pub fn release(&self, handle: &ImageRef) {
        self.notify(ImageOperation::Release {
            handle: handle.clone(),
        });
    }

    fn notify(&self, operation: ImageOperation) {
        let context = self.context.clone();
        self.context.spawn(async move {
            context.notify_shell(operation).await;
        });
    }
}
