use futures::channel::mpsc::UnboundedSender;
use log::debug;
use strategy_types::SlotSelector;

pub enum ToTracker {
    Track {
        uid: String,
        selectors: Vec<SlotSelector>,
    },
}

impl ToTracker {
    pub fn send(self, tx: &UnboundedSender<Self>) {
        if tx.unbounded_send(self).is_err() {
            debug!("send to lifecycle tracker failed because the receiver was dropped");
        }
    }
}
