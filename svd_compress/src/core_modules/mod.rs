pub mod channel;
pub mod eigen_solver;
pub mod gram_computer;
pub mod matrix_ops;
pub mod quality_evaluator;
pub mod rank_reconstructor;
pub mod svd_builder;
