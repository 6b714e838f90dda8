pub mod vthread;
