mod concurrent_observers_case1;
mod slow_response_case2;
