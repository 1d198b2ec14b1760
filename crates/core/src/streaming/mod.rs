pub mod mjpeg_stream;
