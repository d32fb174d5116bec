use slotmap::new_key_type;

new_key_type! {
    /// Stable handle to a node owned by a [`Procedure`](super::procedure::Procedure).
    pub struct NodeId;
    /// Stable handle to a node sequence owned by a [`Procedure`](super::procedure::Procedure).
    pub struct SequenceId;
}
