pub mod efd;
