mod capacity_pipeline;
