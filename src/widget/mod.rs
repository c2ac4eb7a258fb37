pub mod library_list;
pub mod reader_view;
