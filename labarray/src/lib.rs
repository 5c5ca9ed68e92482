mod align;
mod coordinates;
mod data;
mod data_array;
mod dataset;
mod dtype;
mod errors;
mod frame;
mod index;
mod indexing;
mod ops;
mod range;
mod reduce;
mod time;
mod variable;

#[cfg(test)]
mod testing;

pub use align::align;
pub use align::Alignable;
pub use align::AlignOptions;
pub use align::JoinMode;
pub use align::Labeled;

pub use coordinates::Coordinates;

pub use data::Data;

pub use data_array::DataArray;
pub use data_array::Iter;
pub use data_array::LocIndexer;
pub use data_array::Rename;
pub use data_array::SharedDataset;

pub use dataset::ConcatDimension;
pub use dataset::Dataset;

pub use dtype::DType;
pub use dtype::Element;

pub use errors::Error;
pub use errors::Result;

pub use frame::MultiIndex;

pub use polars::frame::DataFrame;
pub use polars::series::Series;

pub use index::Index;
pub use index::Label;

pub use indexing::expanded_indexer;
pub use indexing::remap_label_indexers;
pub use indexing::Indexer;
pub use indexing::Key;
pub use indexing::LabelIndexer;
pub use indexing::Selection;
pub use indexing::Slice;

pub use ops::BinaryOp;
pub use ops::Operand;
pub use ops::Operator;
pub use ops::UnaryOp;
pub use ops::OPERATORS;

pub use range::FloatRange;
pub use range::IntRange;
pub use range::TimeRange;

pub use reduce::FnReducer;
pub use reduce::ReduceOp;
pub use reduce::Reducer;

pub use time::FIELDS as TIME_FIELDS;

pub use variable::AttrValue;
pub use variable::Attributes;
pub use variable::Variable;
