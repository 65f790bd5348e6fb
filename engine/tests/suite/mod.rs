mod live_query;
