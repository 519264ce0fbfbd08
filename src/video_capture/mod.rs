mod frame;
mod video_capture;

pub use self::frame::ThreadedFrame;
pub use self::video_capture::get_video_capture;
