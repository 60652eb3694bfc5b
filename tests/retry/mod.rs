mod retry_cap_case1;
