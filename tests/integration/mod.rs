mod ingest_workflow;
