mod frame;
mod id;

mod interface;
pub use interface::SocketCanInterface;
