mod client;
mod slots;
mod source;

pub use client::{LogicalSlotClient, SlotClient, TEST_DECODING_PLUGIN};
pub use slots::{MAX_SLOT_NAME_LENGTH, validate_slot_name};
pub use source::{LogicalSlotSource, SlotAdvancer};
