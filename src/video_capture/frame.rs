use opencv::core::Mat;

/// One decoded frame handed from the capture thread to the processing loop,
/// the out-of-scope "video decoding" collaborator's output (spec §1).
pub struct ThreadedFrame {
    pub frame: Mat,
    pub overall_seconds: f32,
    pub current_second: f32,
}
