pub mod efd_icms_ipi;
