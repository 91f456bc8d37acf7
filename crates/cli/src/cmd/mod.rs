mod add;
mod list;
mod post_process;
mod remove;
mod update;

pub use add::cmd_add;
pub use list::cmd_list;
pub use post_process::cmd_post_process;
pub use remove::cmd_remove;
pub use update::cmd_update;
