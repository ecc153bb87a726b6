use analyzer::ActionTable;
use interpreter::Host;
use primitives::ActionSignature;

/// Adapts a [`Host`]'s `action_signature` lookup to the narrower
/// [`ActionTable`] the analyzer needs during structural analysis. The
/// analyzer never executes an action, only needs to know its cell
/// footprint, so it is handed this read-only view rather than the full
/// `&mut dyn Host` the VM dispatches through at runtime.
pub struct HostActionTable<'a>(&'a dyn Host);

impl<'a> HostActionTable<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        Self(host)
    }
}

impl<'a> ActionTable for HostActionTable<'a> {
    fn signature(&self, ordinal: u16) -> Option<&ActionSignature> {
        self.0.action_signature(ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interpreter::DummyHost;

    #[test]
    fn forwards_to_host() {
        let host = DummyHost::default();
        let table = HostActionTable::new(&host);
        assert!(table.signature(1).is_none());
    }
}
