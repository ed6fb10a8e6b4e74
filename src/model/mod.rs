pub mod cluster;
pub mod iteration;
pub mod work_item;
