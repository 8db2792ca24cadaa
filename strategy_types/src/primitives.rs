pub type CommitteeIndex = u64;
pub type Epoch = u64;
pub type Slot = u64;
pub type UnixSeconds = u64;
pub type ValidatorIndex = u64;
