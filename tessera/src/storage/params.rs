use uuid::Uuid;

/// Parameters for opening a suspension before a dispatch attempt.
pub struct OpenSuspensionParams<'a> {
    /// Workflow execution that owns the attempt
    pub execution_id: Uuid,
    /// 1-indexed attempt number
    pub attempt: u32,
    /// Name of the dispatch step being attempted
    pub activity_name: &'a str,
}
