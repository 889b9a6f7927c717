use crux_core::capability::{CapabilityContext, Operation};
use crux_core::macros::Capability;
use serde::{Deserialize, Serialize};

/// A blocking, user-visible notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlertOperation {
    Show { message: String },
}

impl Operation for AlertOperation {
    type Output = ();
}

#[derive(Capability)]
pub struct Alert<Ev> {
    context: CapabilityContext<AlertOperation, Ev>,
}

impl<Ev> Alert<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<AlertOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn show(&self, message: impl Into<String>) {
        let context = self.context.clone();
        let operation = AlertOperation::Show {
            message: message.into(),
        };
        self.context.spawn(async move {
            context.notify_shell(operation).await;
        });
    }
}
