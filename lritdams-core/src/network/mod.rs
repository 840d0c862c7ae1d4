mod distributor;
mod registry;
mod server;
mod session;

pub use distributor::{DistributeReport, Distributor};
pub use registry::Registry;
pub use server::{Server, SessionFactory, tcp_session_factory};
pub use session::{BoxedReader, BoxedWriter, ClientSession};
