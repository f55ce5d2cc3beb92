mod compaction;
mod completion;
