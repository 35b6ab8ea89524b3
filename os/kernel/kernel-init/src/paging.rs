/// The boot-time paging bring-up.
///
/// Called once the block allocator exists. When it returns, physical memory
/// must be reachable through [`kernel_info::memory::physical_to_virtual`].
pub trait Paging {
    fn setup_paging(&mut self);
}
