pub const UDP: &str = "UDP";
pub const HEADER_LEN: usize = 8;
pub const DEFAULT_PORT: u16 = 53;
